use std::io;
use std::io::Write;

use anyhow::Context;
use anyhow::Result;
use runpanel_core::actions::PanelAction;
use runpanel_core::actions::RuntimeAction;
use runpanel_core::actions::UserAction;
use runpanel_core::config::AppMode;
use runpanel_core::config::Config;
use runpanel_core::events::RunEvent;
use runpanel_core::reducer::reduce;
use runpanel_core::reducer::PanelEffect;
use runpanel_core::state::PanelState;
use runpanel_core::state::RunStatus;
use runpanel_core::view::detail_json;
use runpanel_core::view::node_line;
use runpanel_core::view::visible_tabs;
use runpanel_core::view::ResultTab;
use runpanel_exec::trigger_run;
use runpanel_exec::AppClient;
use runpanel_exec::StreamItem;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::settings::InputValue;

pub struct RunOptions {
    pub inputs: Vec<(String, InputValue)>,
    pub mode: Option<AppMode>,
    pub json: bool,
}

/// Run once without the terminal UI. Returns whether the run finished.
pub fn run_once(runtime: &Runtime, config: &Config, options: RunOptions) -> Result<bool> {
    let client = AppClient::new(&config.api).context("failed to create api client")?;
    let mut state = PanelState::new(options.mode.or(config.app.mode), config.ui.notice_capacity);

    runtime.block_on(async {
        if state.header.mode.is_none() {
            match client.info().await {
                Ok(info) => {
                    reduce(&mut state, PanelAction::Runtime(RuntimeAction::SetAppInfo(info)));
                }
                Err(err) => warn!(error = %err, "could not resolve app mode from app info"),
            }
        }
        // Field kinds decide how file inputs are sent, and defaults fill the rest.
        match client.parameters().await {
            Ok(fields) => {
                reduce(&mut state, PanelAction::Runtime(RuntimeAction::SetFormFields(fields)));
            }
            Err(err) => warn!(error = %err, "could not load the input form"),
        }
    });

    for (variable, value) in options.inputs {
        let action = match value {
            InputValue::Text(value) => UserAction::SetFieldValue { variable, value },
            InputValue::File(path) => UserAction::AddFile { variable, path },
        };
        reduce(&mut state, PanelAction::User(action));
    }

    runtime.block_on(async {
        let effects = reduce(&mut state, PanelAction::User(UserAction::SubmitRun));
        let Some((run_id, inputs, files)) = effects.into_iter().find_map(|effect| match effect {
            PanelEffect::StartRun {
                run_id,
                inputs,
                files,
            } => Some((run_id, inputs, files)),
            _ => None,
        }) else {
            return;
        };

        let cancel = CancellationToken::new();
        let mode = state.header.mode;
        let result = trigger_run(&client, mode, inputs, files, &cancel, |item| {
            let action = match item {
                StreamItem::Event(event) => {
                    let node_id = match &event {
                        RunEvent::NodeStarted { id, .. } => Some(id.clone()),
                        RunEvent::NodeFinished(done) => Some(done.id.clone()),
                        _ => None,
                    };
                    reduce(
                        &mut state,
                        PanelAction::Runtime(RuntimeAction::Event { run_id, event }),
                    );
                    if let Some(node) = node_id.as_deref().and_then(|id| state.run.node(id)) {
                        eprintln!("{}", node_line(node));
                    }
                    return;
                }
                StreamItem::Rejected { reason } => RuntimeAction::ChunkRejected { run_id, reason },
            };
            reduce(&mut state, PanelAction::Runtime(action));
        })
        .await;

        let done = match result {
            Ok(_) => RuntimeAction::StreamCompleted { run_id },
            Err(err) if err.is_dispatch_rejection() => RuntimeAction::DispatchRejected {
                run_id,
                message: err.to_string(),
            },
            Err(err) => RuntimeAction::StreamFailed {
                run_id,
                message: err.to_string(),
            },
        };
        reduce(&mut state, PanelAction::Runtime(done));
    });

    for notice in state.notices.iter() {
        eprintln!("[{}] {}", notice.level.label(), notice.message);
    }
    if state.active.rejected_chunks > 0 {
        eprintln!("skipped {} malformed chunk(s)", state.active.rejected_chunks);
    }

    let mut out = io::stdout().lock();
    if options.json {
        writeln!(out, "{}", detail_json(&state.run))?;
    } else {
        print_results(&mut out, &state)?;
    }
    Ok(state.run.status != RunStatus::Idle)
}

fn print_results(out: &mut impl Write, state: &PanelState) -> io::Result<()> {
    let tabs = visible_tabs(&state.run);
    if tabs.is_empty() {
        if !state.run.text.is_empty() {
            writeln!(out, "{}", state.run.text)?;
        }
        return Ok(());
    }
    for tab in tabs {
        writeln!(out, "== {} ==", tab.label())?;
        match tab {
            ResultTab::Result => writeln!(out, "{}", state.run.text)?,
            ResultTab::Files => {
                for file in &state.run.files {
                    match file.url.as_deref() {
                        Some(url) => writeln!(out, "{}  {}", file.display_name(), url)?,
                        None => writeln!(out, "{}", file.display_name())?,
                    }
                }
            }
            ResultTab::Detail => writeln!(out, "{}", detail_json(&state.run))?,
        }
    }
    Ok(())
}

/// Print app info and the input form.
pub fn show_params(runtime: &Runtime, config: &Config) -> Result<()> {
    let client = AppClient::new(&config.api).context("failed to create api client")?;
    let (info, fields) = runtime.block_on(async {
        let info = client.info().await.context("failed to fetch app info")?;
        let fields = client
            .parameters()
            .await
            .context("failed to fetch app parameters")?;
        anyhow::Ok((info, fields))
    })?;

    let mut out = io::stdout().lock();
    writeln!(out, "{}", info.name)?;
    if !info.description.is_empty() {
        writeln!(out, "{}", info.description)?;
    }
    let mode = config
        .app
        .mode
        .or_else(|| info.app_mode())
        .map(|mode| mode.as_str())
        .or(info.mode.as_deref())
        .unwrap_or("unknown");
    writeln!(out, "mode: {mode}")?;
    if !info.tags.is_empty() {
        writeln!(out, "tags: {}", info.tags.join(", "))?;
    }

    if fields.is_empty() {
        writeln!(out, "no inputs")?;
    }
    for field in fields {
        let mut line = format!("  {} ({}", field.variable, field.kind.label());
        if field.required {
            line.push_str(", required");
        }
        if let Some(max) = field.max_length {
            line.push_str(&format!(", max {max}"));
        }
        line.push(')');
        if field.label != field.variable {
            line.push_str(&format!("  {}", field.label));
        }
        if !field.options.is_empty() {
            line.push_str(&format!("  [{}]", field.options.join(" | ")));
        }
        writeln!(out, "{line}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn prints_visible_tabs_in_order() {
        let mut state = PanelState::default();
        state.run.outputs = json!({"answer": "42"}).as_object().cloned().unwrap_or_default();
        state.run.text = "42".to_string();

        let mut buf = Vec::new();
        print_results(&mut buf, &state).expect("print");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "== Result ==\n42\n== Detail ==\n{\n  \"answer\": \"42\"\n}\n"
        );
    }

    #[test]
    fn prints_streamed_text_without_outputs() {
        let mut state = PanelState::default();
        state.run.text = "Hello".to_string();
        let mut buf = Vec::new();
        print_results(&mut buf, &state).expect("print");
        assert_eq!(String::from_utf8(buf).expect("utf8"), "Hello\n");
    }
}
