//! Opens a lesson file in a window.
//!
//! ```text
//! topo-viewer <lesson.json> [viewer-config.json]
//! ```
//!
//! New annotations are printed to stdout as one JSON object per line.

use anyhow::Context as _;
use topo_stage::{config::ViewerConfig, flow, lesson::Lesson};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let lesson_path = args
        .next()
        .context("usage: topo-viewer <lesson.json> [viewer-config.json]")?;
    let json = std::fs::read_to_string(&lesson_path)
        .with_context(|| format!("reading lesson {}", lesson_path))?;
    let lesson = Lesson::from_json_str(&json).with_context(|| format!("parsing {}", lesson_path))?;
    let config = match args.next() {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    flow::run(lesson, config, |annotation| {
        match serde_json::to_string(annotation) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("cannot serialise annotation {}: {}", annotation.id, e),
        }
    })
}
