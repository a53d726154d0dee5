//! `sleuth submit` - send a theory to one of the analysis tools.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use sleuth_core::config::ClientConfig;
use sleuth_core::presenter;
use sleuth_core::workflow::{NotificationKind, SubmissionRequest, SubmissionWorkflow, ToolKind};

use super::cases::load_catalog;
use super::{open_store, print_json};

/// Arguments for `sleuth submit`.
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Analysis tool (synopsis, hypothesis, bias, logic)
    #[arg(short, long, default_value = "synopsis")]
    pub tool: ToolKind,

    /// Case id
    #[arg(long = "case")]
    pub case_id: u64,

    /// Case text; read from the catalog when omitted
    #[arg(long)]
    pub case_text: Option<String>,

    /// Theory text
    #[arg(long, conflicts_with = "theory_file", required_unless_present = "theory_file")]
    pub theory: Option<String>,

    /// Read the theory from a file
    #[arg(long)]
    pub theory_file: Option<PathBuf>,
}

impl SubmitArgs {
    fn read_theory(&self) -> Result<String> {
        match (&self.theory, &self.theory_file) {
            (Some(theory), _) => Ok(theory.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read theory from {}", path.display())),
            (None, None) => bail!("a theory is required (--theory or --theory-file)"),
        }
    }

    fn build_request(&self, config: &ClientConfig) -> Result<SubmissionRequest> {
        let theory = self.read_theory()?;
        if let Some(text) = &self.case_text {
            return Ok(SubmissionRequest::new(self.case_id, text.clone(), theory));
        }
        let catalog = load_catalog(config).context("pass --case-text or configure a catalog")?;
        let case = catalog.find(self.case_id)?;
        Ok(SubmissionRequest::for_case(case, theory))
    }
}

/// Runs `sleuth submit`.
pub async fn run(config: &ClientConfig, args: &SubmitArgs, json: bool) -> Result<()> {
    let request = args.build_request(config)?;
    request.validate()?;

    let store = open_store(config).await?;
    if !store.session().is_authenticated() {
        bail!("not signed in; run `sleuth login <wallet>` first");
    }

    let workflow = SubmissionWorkflow::new(args.tool, store.client(), store.view())
        .with_notification_window(config.notification_window());
    let result = workflow.submit(request).await;

    if let Some(notification) = workflow.notification() {
        match notification.kind() {
            NotificationKind::Success => eprintln!("{}", notification.message()),
            NotificationKind::Error => eprintln!("error: {}", notification.message()),
        }
    }

    let outcome = result.with_context(|| format!("{} submission failed", args.tool))?;
    if json {
        return print_json(&outcome);
    }
    print!("{}", presenter::present(&outcome));
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SubmitArgs,
    }

    fn parse(argv: &[&str]) -> Result<SubmitArgs, clap::Error> {
        Harness::try_parse_from(std::iter::once("submit").chain(argv.iter().copied()))
            .map(|harness| harness.args)
    }

    #[test]
    fn test_defaults_to_synopsis() {
        let args = parse(&["--case", "3", "--theory", "He left by boat"]).unwrap();
        assert_eq!(args.tool, ToolKind::Synopsis);
        assert_eq!(args.case_id, 3);
    }

    #[test]
    fn test_tool_names_are_case_insensitive() {
        let args = parse(&["--tool", "Logic", "--case", "1", "--theory", "x"]).unwrap();
        assert_eq!(args.tool, ToolKind::Logic);
        assert!(parse(&["--tool", "timeline", "--case", "1", "--theory", "x"]).is_err());
    }

    #[test]
    fn test_theory_is_required() {
        assert!(parse(&["--case", "1"]).is_err());
    }

    #[test]
    fn test_case_text_skips_catalog() {
        let args = parse(&["--case", "9", "--case-text", "A keeper vanished.", "--theory", "Boat"]).unwrap();
        let request = args.build_request(&ClientConfig::default()).unwrap();
        assert_eq!(request.case_id(), 9);
        assert_eq!(request.case_description(), "A keeper vanished.");
    }

    #[test]
    fn test_case_text_from_catalog() {
        let mut catalog = tempfile::NamedTempFile::new().unwrap();
        write!(
            catalog,
            r#"[{{"id": 4, "title": "The Lighthouse", "description": "A keeper vanished."}}]"#
        )
        .unwrap();
        let mut theory = tempfile::NamedTempFile::new().unwrap();
        write!(theory, "He left by boat").unwrap();

        let config = ClientConfig {
            catalog_path: Some(catalog.path().to_path_buf()),
            ..ClientConfig::default()
        };
        let theory_path = theory.path().to_string_lossy().into_owned();
        let args = parse(&["--case", "4", "--theory-file", &theory_path]).unwrap();
        let request = args.build_request(&config).unwrap();

        assert_eq!(request.case_description(), "A keeper vanished.");
        assert_eq!(request.theory(), "He left by boat");
    }

    #[test]
    fn test_unknown_case_is_an_error() {
        let mut catalog = tempfile::NamedTempFile::new().unwrap();
        write!(catalog, "[]").unwrap();
        let config = ClientConfig {
            catalog_path: Some(catalog.path().to_path_buf()),
            ..ClientConfig::default()
        };
        let args = parse(&["--case", "4", "--theory", "x"]).unwrap();
        assert!(args.build_request(&config).is_err());
    }
}
