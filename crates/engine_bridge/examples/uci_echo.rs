//! Drive a toy UCI-style engine through the bridge from the terminal.
//! Each stdin line is submitted as one command; engine output lines are
//! printed as they are delivered on the engine thread.
//!
//! Flags:
//! - `--config <path>` to load a TOML `BridgeConfig` (thread name, startup lines, limits).
//!
//! Example:
//! ```bash
//! printf 'isready\ngo depth 3\nquit\n' | cargo run -p engine_bridge --example uci_echo
//! ```

use std::{
    env,
    error::Error,
    fs,
    io::{self, BufRead, BufReader, Write},
};

use engine_bridge::{BridgeConfig, CallerHandle, EngineBridge, EngineInput, EngineOutput};

fn toy_engine(input: EngineInput, mut output: EngineOutput) -> io::Result<()> {
    for line in BufReader::new(input).lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("uci") => {
                writeln!(output, "id name Toy")?;
                writeln!(output, "uciok")?;
            }
            Some("isready") => writeln!(output, "readyok")?,
            Some("go") => {
                let depth = words
                    .skip_while(|w| *w != "depth")
                    .nth(1)
                    .and_then(|d| d.parse::<u32>().ok())
                    .unwrap_or(1);
                for d in 1..=depth {
                    // Deliberately split across writes; the bridge reassembles lines.
                    write!(output, "info depth {d}")?;
                    writeln!(output, " score cp {}", d * 7)?;
                }
                writeln!(output, "bestmove e2e4")?;
            }
            Some("quit") => break,
            Some(other) => writeln!(output, "info string unknown command {other}")?,
            None => {}
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let config = match (args.next().as_deref(), args.next()) {
        (Some("--config"), Some(path)) => BridgeConfig::from_toml_str(&fs::read_to_string(path)?)?,
        _ => BridgeConfig {
            startup_lines: vec!["uci\n".to_string()],
            ..BridgeConfig::default()
        },
    };

    let bridge = EngineBridge::with_config(toy_engine, config)?;
    let caller = CallerHandle::new(|line: &str| println!("< {line}"));

    for line in io::stdin().lock().lines() {
        let line = line?;
        bridge.submit_line(&caller, format!("{line}\n"))?;
        if line.trim() == "quit" {
            break;
        }
    }

    bridge.shutdown()?;
    Ok(())
}
