//! Terminal host surface: one lattice cell per character cell, diffed to stdout.

use std::io::{self, Write};

use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};

use crate::atlas::GlyphImage;
use crate::color::Rgba;
use crate::error::{FogError, Result};
use crate::surface::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub struct CellBuffer {
    pub w: u16,
    pub h: u16,
    pub cells: Vec<Cell>,
}

impl CellBuffer {
    pub fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }

    #[inline]
    pub fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }

    pub fn get(&self, x: u16, y: u16) -> Option<Cell> {
        (x < self.w && y < self.h).then(|| self.cells[self.idx(x, y)])
    }

    pub fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }

    pub fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell {
            ch: ' ',
            fg: Color::White,
            bg,
        });
    }
}

pub fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

/// Renders each glyph as its character, colored by blending the glyph tint over the
/// background at the current alpha. The glyph's rect center picks the cell.
pub struct CellSurface {
    pub buf: CellBuffer,
    background: Rgba,
    alpha: f32,
}

impl CellSurface {
    pub fn new(w: u16, h: u16, background: Rgba) -> Self {
        let mut buf = CellBuffer::new(w, h);
        buf.clear(background.to_crossterm());
        Self {
            buf,
            background,
            alpha: 1.0,
        }
    }

    pub fn resize(&mut self, w: u16, h: u16) {
        self.buf = CellBuffer::new(w, h);
        self.buf.clear(self.background.to_crossterm());
    }

    pub fn background(&self) -> Rgba {
        self.background
    }

    pub fn set_background(&mut self, background: Rgba) {
        self.background = background;
    }
}

impl Surface for CellSurface {
    fn clear(&mut self) {
        self.buf.clear(self.background.to_crossterm());
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    fn draw_glyph(&mut self, glyph: &GlyphImage, x: f32, y: f32, w: f32, h: f32) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let col = ((x + w * 0.5) / w).floor();
        let row = ((y + h * 0.5) / h).floor();
        if col < 0.0 || row < 0.0 || col >= self.buf.w as f32 || row >= self.buf.h as f32 {
            return;
        }
        let fg = Rgba::lerp(self.background, glyph.tint, self.alpha);
        self.buf.set(
            col as u16,
            row as u16,
            Cell {
                ch: glyph.ch,
                fg: fg.to_crossterm(),
                bg: self.background.to_crossterm(),
            },
        );
    }
}

/// Queue everything needed to hand the screen back to the shell.
fn queue_restore<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(
        out,
        EndSynchronizedUpdate,
        ResetColor,
        cursor::Show,
        EnableLineWrap,
        LeaveAlternateScreen
    )?;
    out.flush()
}

/// Write the cells of `cur` that differ from `prev` (all of them when `prev` is
/// `None`) inside one synchronized update. Returns how many cells were printed.
pub fn write_diff<W: Write>(
    out: &mut W,
    cur: &CellBuffer,
    prev: Option<&CellBuffer>,
) -> io::Result<usize> {
    queue!(out, BeginSynchronizedUpdate)?;

    let mut written = 0;
    let mut at: Option<(u16, u16)> = None;
    let mut fg = None;
    let mut bg = None;

    for y in 0..cur.h {
        for x in 0..cur.w {
            let i = cur.idx(x, y);
            let c = cur.cells[i];
            if prev.is_some_and(|p| p.cells.get(i) == Some(&c)) {
                continue;
            }
            // runs of changed cells print without repositioning
            if at != Some((x, y)) {
                queue!(out, cursor::MoveTo(x, y))?;
            }
            if fg != Some(c.fg) {
                queue!(out, SetForegroundColor(c.fg))?;
                fg = Some(c.fg);
            }
            if bg != Some(c.bg) {
                queue!(out, SetBackgroundColor(c.bg))?;
                bg = Some(c.bg);
            }
            queue!(out, Print(c.ch))?;
            at = (x + 1 < cur.w).then_some((x + 1, y));
            written += 1;
        }
    }

    queue!(out, ResetColor, EndSynchronizedUpdate)?;
    out.flush()?;
    Ok(written)
}

/// Owns the alternate screen and raw mode for its lifetime. Dropping it restores the
/// terminal, so early returns and panics leave the shell usable.
pub struct Terminal {
    out: io::Stdout,
    pub cols: u16,
    pub rows: u16,
    prev: CellBuffer,
    pub surface: CellSurface,
    force_full: bool,
    active: bool,
}

impl Terminal {
    /// Enter the alternate screen in raw mode. Failure here means there is nothing to
    /// draw on.
    pub fn begin(background: Rgba) -> Result<Self> {
        let unavailable = |err: io::Error| FogError::SurfaceUnavailable(err.to_string());

        let (cols, rows) = terminal::size().map_err(unavailable)?;
        if cols == 0 || rows == 0 {
            return Err(FogError::SurfaceUnavailable(format!(
                "terminal reports {cols}x{rows}"
            )));
        }

        // armed before touching the screen so a failure below still restores it
        let mut term = Self {
            out: io::stdout(),
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            surface: CellSurface::new(cols, rows, background),
            force_full: true,
            active: true,
        };
        execute!(
            term.out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            Clear(ClearType::All)
        )
        .map_err(unavailable)?;
        terminal::enable_raw_mode().map_err(unavailable)?;
        Ok(term)
    }

    /// Restore the terminal, reporting failures. Dropping does the same silently.
    pub fn end(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let screen = queue_restore(&mut self.out);
        let raw = terminal::disable_raw_mode();
        screen?;
        raw?;
        Ok(())
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == self.cols && rows == self.rows {
            return;
        }
        self.cols = cols;
        self.rows = rows;
        self.prev = CellBuffer::new(cols, rows);
        self.surface.resize(cols, rows);
        self.force_full = true;
    }

    /// Next `present` repaints every cell.
    pub fn invalidate(&mut self) {
        self.force_full = true;
    }

    pub fn present(&mut self) -> Result<()> {
        let prev = (!self.force_full).then_some(&self.prev);
        write_diff(&mut self.out, &self.surface.buf, prev)?;
        self.prev.cells.copy_from_slice(&self.surface.buf.cells);
        self.force_full = false;
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.active {
            let _ = queue_restore(&mut self.out);
            let _ = terminal::disable_raw_mode();
        }
    }
}
