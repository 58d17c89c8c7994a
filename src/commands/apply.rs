use crate::api::{self, Mode};
use crate::apply::{ApplyOptions, ApplyReport, TemplateApplier};
use crate::args::ApplyArgs;
use crate::commands::{plural, spreadsheet_ref, Out};
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::parse_sheet_list;
use crate::{Config, Result};
use std::fmt::Write;

/// Re-templates worksheets: each target gets the template's structure and keeps its values and
/// position. Unfinished targets from an interrupted run are completed first unless `--no-resume`
/// was given.
pub async fn apply(config: &Config, mode: Mode, args: &ApplyArgs) -> Result<Out<ApplyReport>> {
    let target = spreadsheet_ref(args.spreadsheet())?;
    // Before opening the store, which loads the OAuth token.
    if args.template_sheet().trim().is_empty() {
        return Err(Error::invalid_argument("A template sheet name is required"));
    }
    let targets = args
        .sheet()
        .map(parse_sheet_list)
        .filter(|list| !list.is_empty());
    let options = ApplyOptions {
        template: args.template_sheet().to_string(),
        targets,
        delete_backup: args.delete_backup(),
        render: args.render(),
        input: args.input(),
        resume: args.resume(),
    };

    let store = api::store(config, mode).await.pub_result(ErrorType::Auth)?;
    let mut applier =
        TemplateApplier::new(store, config.timeout()).with_journal(config.journal());
    let report = applier.apply(&target, &options).await?;
    Ok(Out::new(summary(&options.template, &report), report))
}

fn summary(template: &str, report: &ApplyReport) -> String {
    let mut message = format!(
        "Applied template '{template}' to {} in '{}'",
        plural(report.targets.len(), "sheet"),
        report.spreadsheet
    );
    for t in &report.targets {
        let backup = if t.backup_deleted {
            format!("backup '{}' deleted", t.backup)
        } else {
            format!("backup '{}'", t.backup)
        };
        let resumed = if t.resumed { ", resumed" } else { "" };
        let _ = write!(message, "\n  {} (index {}, {backup}{resumed})", t.title, t.index);
    }
    message
}
