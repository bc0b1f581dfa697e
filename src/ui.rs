#![cfg(feature = "std")]

use std::fmt::Write;

use crate::{board::Position, game::GameEngine, missile::Missile};

/// Text layout of the board: `C` commander, `S` soldier, `x` casualty,
/// `*` blast zone, `.` empty. Rows are y, columns are x.
pub fn render_battlefield(engine: &GameEngine, missile: Option<&Missile>) -> String {
    let n = engine.settings().board_size;
    let mut grid = vec![vec!['.'; n as usize]; n as usize];

    if let Some(m) = missile {
        for cell in m.blast_zone(n) {
            grid[cell.y as usize][cell.x as usize] = '*';
        }
    }
    for r in engine.roster() {
        let Position { x, y } = r.position;
        let glyph = if !r.alive {
            'x'
        } else if r.id == engine.commander() {
            'C'
        } else {
            'S'
        };
        let slot = &mut grid[y as usize][x as usize];
        // Living soldiers win over casualties and the blast marker.
        if *slot != 'C' && !(glyph == 'x' && *slot == 'S') {
            *slot = glyph;
        }
    }

    let mut out = String::new();
    out.push_str("   ");
    for x in 0..n {
        let _ = write!(out, "{:>3}", x);
    }
    out.push('\n');
    for (y, row) in grid.iter().enumerate() {
        let _ = write!(out, "{:>3}", y);
        for ch in row {
            let _ = write!(out, "{:>3}", ch);
        }
        out.push('\n');
    }
    out
}

/// One-line summary of the roster.
pub fn render_roster(engine: &GameEngine) -> String {
    let mut out = String::new();
    for r in engine.roster() {
        let role = if r.id == engine.commander() { "commander" } else { "soldier" };
        let state = if r.alive { "alive" } else { "hit" };
        let _ = writeln!(
            out,
            "{:>3} {:<9} {:<5} at {} speed {} [{}]",
            r.id, role, state, r.position, r.speed, r.address
        );
    }
    out
}
