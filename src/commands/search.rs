use anyhow::Result;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::message::{Role, platform_display_name};
use crate::monitor::search::{SearchFilters, search};
use crate::monitor::store::load_corpus;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub query: String,
    pub platform: Option<String>,
    pub role: Option<Role>,
    pub limit: Option<usize>,
}

pub fn run(opts: &SearchOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("search");

    let filters = SearchFilters {
        platform: opts
            .platform
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "all")
            .map(str::to_ascii_lowercase),
        role: opts.role,
        max_results: opts.limit.unwrap_or(ctx.config.search.max_results),
    };

    let corpus = load_corpus(&ctx.store)?;
    let results = search(&opts.query, &filters, &corpus);
    report.detail(format!("query={:?} results={}", opts.query.trim(), results.len()));
    for result in &results {
        report.detail(format!(
            "{} [{}] {}: {}",
            result.date,
            platform_display_name(&result.message.platform),
            result.message.role.speaker(),
            result.excerpt.replace(['\r', '\n'], " ")
        ));
    }
    report.set_data(&results)?;
    Ok(report)
}
