//! `sr guarantee`: add the cheapest synthetic routes that make the network
//! connected.
//!
//! `--json` prints the body of `POST /smart-routes/connectivity/guarantee`.
//! Safe to run repeatedly and concurrently: a connected network is left
//! alone, and a guarantee that loses a race to another writer re-reads the
//! store before deciding what to add.

use std::io::Write;

use routes_core::config::EffectiveConfig;
use routes_graph::GuaranteeOutcome;

use crate::cmd::open_service;
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, render};

/// Execute `sr guarantee`.
pub fn run_guarantee(config: &EffectiveConfig, output: OutputMode) -> anyhow::Result<()> {
    let service = open_service(config, output)?;
    let outcome = service
        .guarantee_connectivity()
        .map_err(|err| fail(output, &CliError::from(&err)))?;

    render(output, &outcome, |o, w| {
        if output.is_pretty() {
            render_guarantee_pretty(o, w)
        } else {
            render_guarantee_text(o, w)
        }
    })
}

fn render_guarantee_pretty(outcome: &GuaranteeOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Connectivity guarantee")?;
    pretty_kv(w, "Before", format!("{} components", outcome.components_before))?;
    pretty_kv(w, "Connected", if outcome.is_connected { "yes" } else { "no" })?;

    if outcome.added_connections.is_empty() {
        writeln!(w)?;
        writeln!(w, "Already connected. No routes added.")?;
        return Ok(());
    }

    pretty_kv(w, "Added", outcome.added_connections.len().to_string())?;
    writeln!(w)?;
    for added in &outcome.added_connections {
        writeln!(w, "  {} -> {}  {:.3}", added.from, added.to, added.weight)?;
    }
    Ok(())
}

fn render_guarantee_text(outcome: &GuaranteeOutcome, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "connected={} added={}",
        outcome.is_connected,
        outcome.added_connections.len()
    )?;
    for added in &outcome.added_connections {
        writeln!(w, "{}\t{}\t{}", added.from, added.to, added.weight)?;
    }
    Ok(())
}
