use std::path::PathBuf;

use tracing::{info, warn};

use tbot_core::{errors::Error, events::Message, shell, Result};

use super::AppState;

const DEFAULT_GIF_TAG: &str = "elephant";
const DEFAULT_CI_REF: &str = "master";

/// A recognized `!command`. Matching is by prefix, first match wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Hi,
    Failed,
    /// `!rm` / `!sh`: echoed back and refused.
    Refuse { command: String },
    Gif { tag: String },
    Godoc { package: Option<String> },
    Test { project: String, git_ref: String },
    Ci { project: String, git_ref: String },
    Usage(&'static str),
}

pub fn parse(text: &str) -> Option<BotCommand> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    let arg = |i: usize| fields.get(i).map(|s| s.to_string());

    let cmd = if text.starts_with("!hi") {
        BotCommand::Hi
    } else if text.starts_with("!failed") {
        BotCommand::Failed
    } else if text.starts_with("!rm") || text.starts_with("!sh") {
        BotCommand::Refuse {
            command: text[1..].to_string(),
        }
    } else if text.starts_with("!gif") {
        BotCommand::Gif {
            tag: arg(1).unwrap_or_else(|| DEFAULT_GIF_TAG.to_string()),
        }
    } else if text.starts_with("!godoc") {
        BotCommand::Godoc { package: arg(1) }
    } else if text.starts_with("!test") {
        match (arg(1), arg(2)) {
            (Some(project), Some(git_ref)) => BotCommand::Test { project, git_ref },
            _ => BotCommand::Usage("usage: !test <project> <branch-or-ref>"),
        }
    } else if text.starts_with("!ci") {
        match arg(1) {
            Some(project) => BotCommand::Ci {
                project,
                git_ref: arg(2).unwrap_or_else(|| DEFAULT_CI_REF.to_string()),
            },
            None => BotCommand::Usage("usage: !ci <project> [<branch-or-ref>]"),
        }
    } else {
        return None;
    };
    Some(cmd)
}

pub async fn handle_message(state: &AppState, msg: &Message) -> Result<()> {
    let Some(cmd) = parse(&msg.content) else {
        return Ok(());
    };
    info!(sender = %msg.sender.email, ?cmd, "command");

    match cmd {
        BotCommand::Hi => {
            state
                .sender
                .reply(msg, format!("{} said hi!", msg.sender.email))
                .await
        }
        BotCommand::Failed => {
            let out = shell::run("systemctl", &["--failed"], None).await?;
            if !out.success {
                return Err(Error::External(format!(
                    "systemctl --failed: {}",
                    out.output.trim()
                )));
            }
            state
                .sender
                .reply(msg, format!("```\n$ systemctl --failed\n{}```", out.output))
                .await
        }
        BotCommand::Refuse { command } => {
            state
                .sender
                .reply(
                    msg,
                    format!(
                        "```\n$ {command}\n```\n\n... haha {}, very funny, but no thanks!",
                        msg.sender.email
                    ),
                )
                .await
        }
        BotCommand::Gif { tag } => {
            let Some(giphy) = &state.giphy else {
                return Err(Error::Config("giphy api key not configured".to_string()));
            };
            let url = giphy.random(&tag).await?;
            state
                .sender
                .reply(msg, format!("here's some {tag}: {url}"))
                .await
        }
        BotCommand::Godoc { package } => match package {
            Some(pkg) => {
                state
                    .sender
                    .reply(msg, format!("https://godoc.org/{pkg}"))
                    .await
            }
            None => Ok(()),
        },
        BotCommand::Test { project, git_ref } => run_tests(state, msg, &project, &git_ref).await,
        BotCommand::Ci { project, git_ref } => start_pipeline(state, msg, &project, &git_ref).await,
        BotCommand::Usage(usage) => state.sender.reply(msg, usage).await,
    }
}

async fn run_tests(state: &AppState, msg: &Message, project: &str, git_ref: &str) -> Result<()> {
    let Some(dir) = project_dir(state, project) else {
        return state
            .sender
            .reply(msg, format!("invalid project name: {project}"))
            .await;
    };
    let dir_str = dir.to_string_lossy().to_string();

    let fetch = shell::run("git", &["-C", dir_str.as_str(), "fetch"], None).await?;
    if !fetch.success {
        warn!(project, output = %fetch.output.trim(), "git fetch failed");
        return state
            .sender
            .reply(msg, format!("git fetch: {:?}", fetch.output.trim()))
            .await;
    }

    let checkout = shell::run("git", &["-C", dir_str.as_str(), "checkout", git_ref], None).await?;
    if !checkout.success {
        warn!(project, git_ref, "git checkout failed");
        return state
            .sender
            .reply(msg, format!("no such branch: {git_ref}"))
            .await;
    }

    let make = shell::run("make", &["test"], Some(&dir)).await?;
    let emoji = if make.success { "🎉" } else { "⛈" };
    state
        .sender
        .reply(msg, format!("{emoji}\n```\n{}\n```", make.output))
        .await
}

/// `<projects_dir>/<project>`, refusing names that would escape the directory.
fn project_dir(state: &AppState, project: &str) -> Option<PathBuf> {
    let valid = !project.is_empty()
        && project != "."
        && project != ".."
        && !project.contains('/')
        && !project.contains('\\');
    valid.then(|| state.cfg.projects_dir.join(project))
}

async fn start_pipeline(
    state: &AppState,
    msg: &Message,
    project: &str,
    git_ref: &str,
) -> Result<()> {
    let Some(gitlab) = &state.gitlab else {
        return Err(Error::Config("gitlab api key not configured".to_string()));
    };

    match gitlab.create_pipeline(project, git_ref).await {
        Ok(p) => {
            state
                .sender
                .reply(
                    msg,
                    format!(
                        "Pipeline {} for {project}@{git_ref} ({})",
                        p.status,
                        gitlab.pipeline_url(project, &p)
                    ),
                )
                .await
        }
        Err(Error::Api { message, .. }) => {
            warn!(project, git_ref, %message, "gitlab rejected pipeline");
            state
                .sender
                .reply(
                    msg,
                    format!("Could not start pipeline for {project:?}: {message}"),
                )
                .await
        }
        Err(e) => Err(e),
    }
}
