use taskrun_core::config::Config;

pub async fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    if config.contexts.is_empty() {
        println!("No contexts configured.");
        println!(
            "`taskrun run` will use {} anonymous local context(s).",
            config.defaults.concurrency
        );
        println!("Run `taskrun config --init` to create a sample config.");
        return Ok(());
    }

    if json {
        let entries: Vec<serde_json::Value> = config
            .contexts
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "type": c.context_type.to_string(),
                    "workdir": c.workdir,
                    "shell": c.shell_binary(),
                    "labels": c.labels,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{:<15} {:<8} {:<20} {}", "NAME", "TYPE", "WORKDIR", "LABELS");
        println!("{}", "-".repeat(60));
        for c in &config.contexts {
            println!(
                "{:<15} {:<8} {:<20} {}",
                c.name,
                c.context_type,
                c.workdir.as_deref().unwrap_or("-"),
                c.labels.join(", "),
            );
        }
    }

    Ok(())
}
