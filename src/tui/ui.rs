//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::ExecState;
use super::app::{DebuggerApp, MEMORY_ROWS};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Percentage(55),
        ])
        .split(frame.area());

    // Left side: code, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory, output and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_output(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw disassembly around PC.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:03}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw engine registers and the debug readout.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let cpu = &app.host.cpu;
    let value = Style::default().fg(Color::White);

    let content = vec![
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:03}", cpu.regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw("   C: "),
            Span::styled(format!("{:03}", cpu.regs.reg_c), value),
            Span::raw("   A: "),
            Span::styled(format!("{:03}", cpu.regs.operand_a), value),
            Span::raw("   lane B: "),
            Span::styled(format!("{}", cpu.regs.lane_b), value),
        ]),
        Line::from(vec![
            Span::raw("IN: "),
            Span::styled(format!("{:#04x}", app.host.input), value),
            Span::raw("  OUT: "),
            Span::styled(format!("{:#04x}", cpu.io.output()), value),
            Span::raw(if cpu.io.strobe() { " ◆" } else { "  " }),
        ]),
        Line::from(vec![
            Span::raw("Debug "),
            Span::styled(format!("{:<6}", app.debug_select.name()), Style::default().fg(Color::Cyan)),
            Span::raw(": "),
            Span::styled(format!("{:#04x} = {}", app.debug_value(), app.debug_value()), value),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   Retired: "),
            Span::styled(format!("{}", cpu.retired), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(format!("{:?}", cpu.state()), state_style(cpu.state())),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory as a hex grid, sixteen bytes per row.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(MEMORY_ROWS);
    let pc = app.host.cpu.regs.pc as usize;

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let mut spans = vec![Span::styled(
                format!("{:02x}: ", row * 16),
                Style::default().fg(Color::Magenta),
            )];

            for (addr, value) in app.host.cpu.mem.dump(row * 16, 16) {
                let addr = addr as usize;
                let style = if (pc..pc + 3).contains(&addr) {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if addr >= 253 {
                    Style::default().fg(Color::Cyan)
                } else if value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:02x} ", value), style));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(list, area);
}

/// Draw collected output as text.
fn draw_output(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let output = Paragraph::new(app.host.output_text())
        .style(Style::default().fg(Color::Green))
        .block(Block::default()
            .title(format!(" Output ({} bytes) ", app.host.outputs().len()))
            .borders(Borders::ALL));

    frame.render_widget(output, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Clock  n: Step  r: Run  p: Pause  b: Breakpoint"),
        Line::from("x: Reset  c: Clear output  d: Debug signal  +/-: Input"),
        Line::from("↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}

/// Color for the engine state.
fn state_style(state: ExecState) -> Style {
    match state {
        ExecState::Halt => Style::default().fg(Color::Red),
        ExecState::ReadInst => Style::default().fg(Color::Green),
        ExecState::ReadData => Style::default().fg(Color::Yellow),
    }
}
