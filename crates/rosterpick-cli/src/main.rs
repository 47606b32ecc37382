// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use rosterpick_app::{FieldState, Jid, PickerController, PickerKind, PickerRequest, Selection};
use rosterpick_db::Store;
use rosterpick_tui::PickerOutcome;
use runtime::{StoreConnector, StoreProvider};
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `rosterpick --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let request = build_request(&options, &config)?;
    request.validate()?;

    logging::init_logging(config.log_level(), &config.log_path()?)?;

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or ROSTERPICK_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo {
        store.seed_demo_data()?;
    }

    let connect_delay = config.connect_delay()?;
    let poll_interval = config.poll_interval()?;
    if options.check_only {
        return Ok(());
    }

    info!(
        kind = request.kind.as_str(),
        db = %db_path.display(),
        multiple = request.multiple,
        "opening picker"
    );
    let kind = request.kind;
    let mut controller = PickerController::new(request, FieldState::default());
    controller.attach(StoreProvider::new(store));
    let mut connector = StoreConnector::new(db_path, connect_delay, poll_interval);
    let outcome = rosterpick_tui::run_picker(&mut controller, &mut connector)?;

    if let Some(line) = render_outcome(&outcome, kind)? {
        println!("{line}");
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    kind: PickerKind,
    account: Option<String>,
    conversation: Option<String>,
    excluded: Vec<String>,
    multiple: bool,
    search: bool,
    title: Option<String>,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        kind: PickerKind::ChooseContact,
        account: None,
        conversation: None,
        excluded: Vec::new(),
        multiple: false,
        search: false,
        title: None,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--kind" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow!("--kind requires one of: contacts, blocklist, shortcut")
                })?;
                options.kind = PickerKind::parse(value.as_ref()).ok_or_else(|| {
                    anyhow!(
                        "unknown picker kind {:?}; use one of: contacts, blocklist, shortcut",
                        value.as_ref()
                    )
                })?;
            }
            "--account" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--account requires an address"))?;
                options.account = Some(value.as_ref().to_owned());
            }
            "--conversation" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--conversation requires an id"))?;
                options.conversation = Some(value.as_ref().to_owned());
            }
            "--exclude" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--exclude requires an address"))?;
                options.excluded.push(value.as_ref().to_owned());
            }
            "--title" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--title requires text"))?;
                options.title = Some(value.as_ref().to_owned());
            }
            "--multiple" => {
                options.multiple = true;
            }
            "--search" => {
                options.search = true;
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn build_request(options: &CliOptions, config: &Config) -> Result<PickerRequest> {
    let mut request = PickerRequest::new(options.kind);
    request.title = options.title.clone();
    request.account = options
        .account
        .as_deref()
        .map(|raw| parse_address("--account", raw))
        .transpose()?;
    request.conversation = options.conversation.clone();
    request.excluded = options
        .excluded
        .iter()
        .map(|raw| parse_address("--exclude", raw))
        .collect::<Result<_>>()?;
    request.multiple = options.multiple;
    request.start_searching = options.search || config.start_searching();
    Ok(request)
}

fn parse_address(flag: &str, raw: &str) -> Result<Jid> {
    Jid::parse(raw).with_context(|| format!("{flag} {raw:?} is not a valid address"))
}

#[derive(Serialize)]
struct ShortcutOutput<'a> {
    #[serde(flatten)]
    selection: &'a Selection,
    uri: String,
}

fn render_outcome(outcome: &PickerOutcome, kind: PickerKind) -> Result<Option<String>> {
    let encoded = match outcome {
        PickerOutcome::Cancelled => return Ok(None),
        PickerOutcome::Selected(selection) if kind == PickerKind::Shortcut => {
            serde_json::to_string(&ShortcutOutput {
                selection,
                uri: selection.item_identifier.xmpp_uri(),
            })
        }
        PickerOutcome::Selected(selection) => serde_json::to_string(selection),
        PickerOutcome::SelectedMany(selection) => serde_json::to_string(selection),
    };
    encoded.map(Some).context("encode selection")
}

fn print_help() {
    println!("rosterpick");
    println!("  --config <path>          Use a specific config path");
    println!("  --kind <kind>            contacts (default), blocklist or shortcut");
    println!("  --account <jid>          Limit the list to one account");
    println!("  --conversation <id>      Conversation the selection is returned to");
    println!("  --exclude <jid>          Hide an address (repeatable)");
    println!("  --multiple               Pick several contacts");
    println!("  --search                 Open with the search field expanded");
    println!("  --title <text>           Override the picker title");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --check                  Validate config + request + DB, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, build_request, parse_cli_args, render_outcome};
    use crate::config::Config;
    use anyhow::Result;
    use rosterpick_app::{Jid, MultiSelection, PickerKind, Selection};
    use rosterpick_tui::PickerOutcome;
    use serde_json::json;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/rosterpick-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                kind: PickerKind::ChooseContact,
                account: None,
                conversation: None,
                excluded: Vec::new(),
                multiple: false,
                search: false,
                title: None,
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        for (flag, message) in [
            ("--config", "--config requires a file path"),
            ("--kind", "--kind requires one of"),
            ("--account", "--account requires an address"),
            ("--exclude", "--exclude requires an address"),
        ] {
            let error = parse_cli_args(vec![flag], default_options_path())
                .expect_err("missing value should fail");
            assert!(error.to_string().contains(message), "{flag}: {error}");
        }
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument_and_kind() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));

        let error = parse_cli_args(vec!["--kind", "rooms"], default_options_path())
            .expect_err("unknown kind should fail");
        assert!(error.to_string().contains("unknown picker kind"));
    }

    #[test]
    fn parse_cli_args_collects_request_options() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--kind",
                "blocklist",
                "--account",
                "me@x",
                "--conversation",
                "conv-9",
                "--exclude",
                "a@x",
                "--exclude",
                "b@x",
                "--title",
                "Block someone",
                "--search",
            ],
            default_options_path(),
        )?;
        assert_eq!(options.kind, PickerKind::Blocklist);
        assert_eq!(options.account.as_deref(), Some("me@x"));
        assert_eq!(options.conversation.as_deref(), Some("conv-9"));
        assert_eq!(options.excluded, vec!["a@x", "b@x"]);
        assert_eq!(options.title.as_deref(), Some("Block someone"));
        assert!(options.search);
        assert!(!options.multiple);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_print_demo_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--print-config-path",
                "--print-example-config",
                "--check",
                "--demo",
                "--print-path",
                "--multiple",
            ],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_db_path);
        assert!(options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(options.multiple);
        assert!(!options.show_help);

        assert!(parse_cli_args(vec!["-h"], default_options_path())?.show_help);
        assert!(parse_cli_args(vec!["--help"], default_options_path())?.show_help);
        Ok(())
    }

    #[test]
    fn build_request_parses_addresses_and_merges_search_flag() -> Result<()> {
        let options = parse_cli_args(
            vec!["--account", "Me@X", "--exclude", "bob@x", "--search"],
            default_options_path(),
        )?;
        let request = build_request(&options, &Config::default())?;
        assert_eq!(request.account, Some(Jid::parse("me@x")?));
        assert_eq!(request.excluded, vec![Jid::parse("bob@x")?]);
        assert!(request.start_searching);

        let plain = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert!(!build_request(&plain, &Config::default())?.start_searching);

        let bad = parse_cli_args(vec!["--exclude", "@"], default_options_path())?;
        let error = build_request(&bad, &Config::default()).expect_err("bad address");
        assert!(error.to_string().contains("--exclude"));
        Ok(())
    }

    fn selection() -> Result<Selection> {
        Ok(Selection {
            item_identifier: Jid::parse("alice@x")?,
            owner_account: Some(Jid::parse("me@x")?),
            originating_context: Some("conv-1".to_owned()),
        })
    }

    #[test]
    fn render_outcome_prints_selection_json() -> Result<()> {
        let line = render_outcome(&PickerOutcome::Selected(selection()?), PickerKind::ChooseContact)?
            .expect("selection is printed");
        let value: serde_json::Value = serde_json::from_str(&line)?;
        assert_eq!(
            value,
            json!({
                "item_identifier": "alice@x",
                "owner_account": "me@x",
                "originating_context": "conv-1",
            })
        );
        Ok(())
    }

    #[test]
    fn render_outcome_adds_uri_for_shortcuts() -> Result<()> {
        let line = render_outcome(&PickerOutcome::Selected(selection()?), PickerKind::Shortcut)?
            .expect("selection is printed");
        let value: serde_json::Value = serde_json::from_str(&line)?;
        assert_eq!(value["uri"], "xmpp:alice@x");
        assert_eq!(value["item_identifier"], "alice@x");
        Ok(())
    }

    #[test]
    fn render_outcome_prints_multi_selection_and_skips_cancel() -> Result<()> {
        let many = PickerOutcome::SelectedMany(MultiSelection {
            item_identifiers: vec![Jid::parse("a@x")?, Jid::parse("b@x")?],
            owner_account: None,
            originating_context: None,
        });
        let line = render_outcome(&many, PickerKind::ChooseContact)?.expect("printed");
        let value: serde_json::Value = serde_json::from_str(&line)?;
        assert_eq!(value["item_identifiers"], json!(["a@x", "b@x"]));
        assert!(value["owner_account"].is_null());

        assert_eq!(
            render_outcome(&PickerOutcome::Cancelled, PickerKind::ChooseContact)?,
            None
        );
        Ok(())
    }
}
