//! `ha-notifier templates` - 管理通知模板

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use super::context::AppPaths;
use super::output::print_json;
use crate::notification::{NewTemplate, Priority, TemplateStore};

fn parse_priority(raw: &str) -> Result<Priority, String> {
    Priority::parse(raw).ok_or_else(|| format!("unknown priority '{}' (info, warning, critical)", raw))
}

#[derive(Args, Debug)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommand,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// 列出模板
    List {
        #[arg(long)]
        json: bool,
    },
    /// 新建模板
    Add {
        name: String,
        #[arg(long, default_value = "info", value_parser = parse_priority)]
        priority: Priority,
        #[arg(long)]
        persistent: bool,
        #[arg(long)]
        popup: bool,
        #[arg(long)]
        require_ack: bool,
    },
    /// 修改模板，未给出的字段保持不变
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        #[arg(long)]
        persistent: Option<bool>,
        #[arg(long)]
        popup: Option<bool>,
        #[arg(long)]
        require_ack: Option<bool>,
    },
    /// 删除模板
    Delete { id: i64 },
}

/// 处理 templates 命令
pub fn handle_templates(paths: &AppPaths, args: TemplatesArgs) -> Result<()> {
    let store = paths.template_store();
    run_templates(&store, args.command)
}

pub fn run_templates(store: &dyn TemplateStore, command: TemplatesCommand) -> Result<()> {
    match command {
        TemplatesCommand::List { json } => {
            let templates = store.all()?;
            if json {
                return print_json(&templates);
            }
            if templates.is_empty() {
                println!("No templates");
            }
            for t in templates {
                println!(
                    "{:>4}  {:<20} prio={} persistent={} popup={} ack={}",
                    t.id, t.name, t.priority, t.persistent, t.popup, t.require_ack
                );
            }
        }
        TemplatesCommand::Add {
            name,
            priority,
            persistent,
            popup,
            require_ack,
        } => {
            let id = store.insert(NewTemplate {
                name,
                priority,
                persistent,
                popup,
                require_ack,
            })?;
            println!("Template {} created", id);
        }
        TemplatesCommand::Update {
            id,
            name,
            priority,
            persistent,
            popup,
            require_ack,
        } => {
            let mut template = store
                .get(id)?
                .ok_or_else(|| anyhow!("Template {} not found", id))?;
            if let Some(name) = name {
                template.name = name;
            }
            if let Some(priority) = priority {
                template.priority = priority;
            }
            if let Some(persistent) = persistent {
                template.persistent = persistent;
            }
            if let Some(popup) = popup {
                template.popup = popup;
            }
            if let Some(require_ack) = require_ack {
                template.require_ack = require_ack;
            }
            store.update(&template)?;
            println!("Template {} updated", id);
        }
        TemplatesCommand::Delete { id } => {
            store.delete(id)?;
            println!("Template {} deleted", id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::JsonTemplateStore;
    use tempfile::TempDir;

    #[test]
    fn test_update_keeps_omitted_fields() {
        let dir = TempDir::new().unwrap();
        let store = JsonTemplateStore::new(dir.path().join("templates.json"));
        run_templates(
            &store,
            TemplatesCommand::Add {
                name: "alarm".to_string(),
                priority: Priority::Critical,
                persistent: true,
                popup: true,
                require_ack: false,
            },
        )
        .unwrap();

        run_templates(
            &store,
            TemplatesCommand::Update {
                id: 1,
                name: None,
                priority: None,
                persistent: None,
                popup: Some(false),
                require_ack: None,
            },
        )
        .unwrap();

        let t = store.get(1).unwrap().unwrap();
        assert_eq!(t.priority, Priority::Critical);
        assert!(t.persistent);
        assert!(!t.popup);
    }

    #[test]
    fn test_update_unknown_is_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonTemplateStore::new(dir.path().join("templates.json"));
        let result = run_templates(
            &store,
            TemplatesCommand::Update {
                id: 5,
                name: None,
                priority: None,
                persistent: None,
                popup: None,
                require_ack: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority("Warning"), Ok(Priority::Warning));
        assert!(parse_priority("loud").is_err());
    }
}
