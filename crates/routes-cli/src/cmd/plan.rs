//! `sr plan`: show the synthetic routes `sr guarantee` would add, without
//! writing anything.

use std::io::Write;

use routes_core::config::EffectiveConfig;
use routes_graph::{AugmentationPreview, LinkReason};

use crate::cmd::open_service;
use crate::output::{CliError, OutputMode, fail, pretty_kv, pretty_section, render};

/// Execute `sr plan`.
pub fn run_plan(config: &EffectiveConfig, output: OutputMode) -> anyhow::Result<()> {
    let service = open_service(config, output)?;
    let preview = service
        .preview_augmentation()
        .map_err(|err| fail(output, &CliError::from(&err)))?;

    render(output, &preview, |p, w| {
        if output.is_pretty() {
            render_plan_pretty(p, w)
        } else {
            render_plan_text(p, w)
        }
    })
}

const fn reason_label(reason: LinkReason) -> &'static str {
    match reason {
        LinkReason::Nearest => "nearest",
        LinkReason::Fallback => "fallback",
    }
}

fn render_plan_pretty(preview: &AugmentationPreview, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Augmentation plan")?;
    pretty_kv(w, "Revision", preview.revision.as_str())?;
    pretty_kv(w, "Components", preview.report.component_count.to_string())?;

    if preview.plan.is_empty() {
        writeln!(w)?;
        writeln!(w, "Network is connected. Nothing to add.")?;
        return Ok(());
    }

    pretty_kv(w, "Routes", preview.plan.len().to_string())?;
    pretty_kv(w, "Total cost", format!("{:.3}", preview.plan.total_cost()))?;
    writeln!(w)?;
    for link in preview.plan.links() {
        writeln!(
            w,
            "  {} -> {}  {:.3}  ({}, components {} + {})",
            link.route.from,
            link.route.to,
            link.route.weight,
            reason_label(link.reason),
            link.components.0,
            link.components.1
        )?;
    }
    Ok(())
}

fn render_plan_text(preview: &AugmentationPreview, w: &mut dyn Write) -> std::io::Result<()> {
    for link in preview.plan.links() {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            link.route.from,
            link.route.to,
            link.route.weight,
            reason_label(link.reason)
        )?;
    }
    Ok(())
}
