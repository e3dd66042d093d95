//! One-shot command-line harness for the ZenReply engine.
//!
//! Takes the raw text as arguments, streams the polished reply to stdout as
//! deltas arrive, and copies the finished text to the system clipboard. The
//! desktop shell replaces the headless window stand-in with a real surface.

use std::env;
use std::io::{self, Write as _};
use std::process::ExitCode;

use anyhow::Context as _;
use arboard::Clipboard as SystemClipboard;
use tracing_subscriber::EnvFilter;

use zenreply_client::ChatClient;
use zenreply_config::FileStore;
use zenreply_engine::{Clipboard, FlowController, WindowSurface};
use zenreply_types::{PresetRole, Stage};

const USAGE: &str =
    "用法: zenreply [--role boss|client|green-tea|pig-teammate] [--custom 对象身份] <原始文本>";

struct ArboardClipboard;

impl Clipboard for ArboardClipboard {
    async fn copy_to_clipboard(&mut self, text: &str) -> anyhow::Result<()> {
        let mut clipboard = SystemClipboard::new().context("初始化剪贴板失败")?;
        clipboard
            .set_text(text.to_string())
            .context("写入剪贴板失败")?;
        Ok(())
    }
}

/// The CLI has no window to manage; every operation trivially succeeds.
struct HeadlessWindow;

impl WindowSurface for HeadlessWindow {
    async fn show(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn hide(&mut self) -> anyhow::Result<()> {
        tracing::debug!("headless window hide");
        Ok(())
    }

    async fn focus(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn resize(&mut self, _width: u32, _height: u32) -> anyhow::Result<()> {
        Ok(())
    }
}

type CliController = FlowController<ChatClient, ArboardClipboard, HeadlessWindow, FileStore>;

struct CliArgs {
    raw_text: String,
    role: Option<PresetRole>,
    custom_role: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut role = None;
    let mut custom_role = None;
    let mut text_parts = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--role" => {
                let value = args.next().context("--role 需要一个取值")?;
                role = Some(match value.as_str() {
                    "boss" => PresetRole::Boss,
                    "client" => PresetRole::Client,
                    "green-tea" => PresetRole::GreenTea,
                    "pig-teammate" => PresetRole::PigTeammate,
                    other => anyhow::bail!("未知角色: {other}"),
                });
            }
            "--custom" => {
                custom_role = Some(args.next().context("--custom 需要一个取值")?);
            }
            _ => text_parts.push(arg),
        }
    }

    Ok(CliArgs {
        raw_text: text_parts.join(" "),
        role,
        custom_role,
    })
}

fn flush_notices(controller: &mut CliController) {
    for notice in controller.drain_notices() {
        eprintln!("{}", notice.message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("zenreply=warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = parse_args(env::args().skip(1))?;
    if args.raw_text.trim().is_empty() {
        eprintln!("{USAGE}");
        return Ok(ExitCode::FAILURE);
    }

    let store = FileStore::from_default_location()?;
    let (mut controller, mut chat_rx) =
        FlowController::new(ChatClient::new(), ArboardClipboard, HeadlessWindow, store);

    controller.on_wake(&args.raw_text);
    if let Some(role) = args.role {
        controller.select_preset_role(role);
    }

    if let Some(label) = args.custom_role {
        controller.start_custom_role_editing();
        controller.set_custom_role_draft(label);
        controller.confirm_custom_role().await;
    } else {
        controller.start_generating(None).await;
    }
    flush_notices(&mut controller);
    if let Some(error) = controller.session().blocking_error() {
        eprintln!("{error}");
        return Ok(ExitCode::FAILURE);
    }

    let mut stdout = io::stdout();
    let mut printed = 0;
    while let Some(event) = chat_rx.recv().await {
        controller.apply_chat_event(event);

        // streamed_text only ever grows by appending, so the printed prefix
        // length stays a valid char boundary.
        let text = controller.session().streamed_text();
        if text.len() > printed {
            write!(stdout, "{}", &text[printed..])?;
            stdout.flush()?;
            printed = text.len();
        }

        match controller.stage() {
            Stage::Generating => {}
            Stage::Finished => {
                writeln!(stdout)?;
                controller.confirm_and_copy().await;
                flush_notices(&mut controller);
                return Ok(ExitCode::SUCCESS);
            }
            Stage::Input => {
                flush_notices(&mut controller);
                if let Some(error) = controller.session().blocking_error() {
                    eprintln!("{error}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::FAILURE)
}

#[cfg(test)]
mod tests {
    use super::parse_args;
    use zenreply_types::PresetRole;

    fn args(parts: &[&str]) -> impl Iterator<Item = String> {
        parts
            .iter()
            .map(|s| (*s).to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn plain_arguments_become_the_raw_text() {
        let parsed = parse_args(args(&["明天", "能开会吗"])).unwrap();
        assert_eq!(parsed.raw_text, "明天 能开会吗");
        assert!(parsed.role.is_none());
        assert!(parsed.custom_role.is_none());
    }

    #[test]
    fn role_and_custom_flags_are_recognized() {
        let parsed = parse_args(args(&["--role", "client", "进度要延期"])).unwrap();
        assert_eq!(parsed.role, Some(PresetRole::Client));

        let parsed = parse_args(args(&["--custom", "奇葩房东", "租金又涨了"])).unwrap();
        assert_eq!(parsed.custom_role.as_deref(), Some("奇葩房东"));
        assert_eq!(parsed.raw_text, "租金又涨了");
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(parse_args(args(&["--role", "classmate", "x"])).is_err());
    }
}
