// flarm/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use flarm_common::config::Config;
use flarm_common::error::Result;
use flarm_core::check::installed::list_installed;
use prettytable::{format, Cell, Row, Table};

#[derive(Args, Debug)]
pub struct List {
    /// Show the install directory of each app
    #[arg(long)]
    pub paths: bool,
}

impl List {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let installed = list_installed(config.apps_root(), &config.manifest_file_name)?;
        if installed.is_empty() {
            println!(
                "{} ({})",
                "0 apps installed".yellow(),
                config.apps_root().display()
            );
            return Ok(());
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        let mut header = vec![
            Cell::new("Name").style_spec("b"),
            Cell::new("Publisher").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("Platform").style_spec("b"),
        ];
        if self.paths {
            header.push(Cell::new("Path").style_spec("b"));
        }
        table.add_row(Row::new(header));

        for pkg in &installed {
            let (publisher, version, platform) = match &pkg.identity {
                Some(id) => (id.publisher.as_str(), id.version.as_str(), id.platform.as_str()),
                None => ("-", "-", "-"),
            };
            let mut row = vec![
                Cell::new(pkg.title()).style_spec("Fb"),
                Cell::new(publisher),
                Cell::new(version),
                Cell::new(platform),
            ];
            if self.paths {
                row.push(Cell::new(&pkg.path.display().to_string()));
            }
            table.add_row(Row::new(row));
        }
        table.printstd();
        println!("{}", format!("{} apps installed", installed.len()).dimmed());
        Ok(())
    }
}
