//! `sr status`: report whether every city can reach every other city.
//!
//! `--json` prints the body of `GET /smart-routes/connectivity`.

use std::io::Write;

use routes_core::config::EffectiveConfig;
use routes_graph::ConnectivityReport;

use crate::cmd::open_service;
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, render};

/// Execute `sr status`.
pub fn run_status(config: &EffectiveConfig, output: OutputMode) -> anyhow::Result<()> {
    let service = open_service(config, output)?;
    let report = service
        .get_connectivity_status()
        .map_err(|err| fail(output, &CliError::from(&err)))?;

    render(output, &report, |r, w| {
        if output.is_pretty() {
            render_status_pretty(r, w)
        } else {
            render_status_text(r, w)
        }
    })
}

fn render_status_pretty(report: &ConnectivityReport, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Connectivity")?;
    pretty_kv(
        w,
        "Connected",
        if report.is_connected { "yes" } else { "no" },
    )?;
    pretty_kv(w, "Components", report.component_count.to_string())?;
    pretty_kv(
        w,
        "Isolated",
        if report.isolated_cities.is_empty() {
            "none".to_string()
        } else {
            report.isolated_cities.join(", ")
        },
    )?;

    if report.component_count > 1 {
        writeln!(w)?;
        for (idx, members) in report.components.iter().enumerate() {
            writeln!(w, "  [{idx}] {}", members.join(", "))?;
        }
    }
    Ok(())
}

fn render_status_text(report: &ConnectivityReport, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "connected={} components={} isolated={}",
        report.is_connected,
        report.component_count,
        report.isolated_cities.len()
    )?;
    for (idx, members) in report.components.iter().enumerate() {
        writeln!(w, "{idx}\t{}", members.join(","))?;
    }
    Ok(())
}
