mod app;
mod draft;
mod model;
mod nav;
mod report;
mod services;
mod theme;
mod ui;
mod visuals;
mod widgets;

use anyhow::Result;

fn main() -> Result<()> {
    ui::run()
}
