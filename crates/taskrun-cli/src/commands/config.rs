use taskrun_core::Config;

const SAMPLE_CONFIG: &str = r#"# taskrun configuration

contexts:
  - name: scratch
    type: local
    workdir: /tmp
    labels:
      - quick-tasks

  - name: bash-env
    type: local
    shell: bash
    env:
      LC_ALL: C
    labels:
      - bash

defaults:
  batch_timeout_secs: 5
  concurrency: 4
"#;

pub async fn run(path: bool, init: bool) -> anyhow::Result<()> {
    if path {
        println!("{}", Config::default_path().display());
        return Ok(());
    }

    if init {
        let config_path = Config::default_path();
        if config_path.exists() {
            println!("Config already exists at: {}", config_path.display());
            println!("Remove it first if you want to reinitialize.");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, SAMPLE_CONFIG)?;
        println!("Sample config written to: {}", config_path.display());
        return Ok(());
    }

    let config_path = Config::default_path();
    println!("Config path: {}", config_path.display());
    if config_path.exists() {
        let config = Config::load_from(&config_path)?;
        println!("Contexts:    {}", config.contexts.len());
        for c in &config.contexts {
            println!("  - {} ({})", c.name, c.context_type);
        }
        println!("Timeout:     {}s", config.defaults.batch_timeout_secs);
        println!("Concurrency: {}", config.defaults.concurrency);
    } else {
        println!("Status:      not found");
        println!("Run `taskrun config --init` to create one.");
    }

    Ok(())
}
