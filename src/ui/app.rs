//! TUI 应用主循环
//!
//! 进入全屏 / 原始模式，每帧读取会话的消息日志与视图，将输入行解析为 Command 发送给会话运行时，
//! 退出时恢复终端并关闭运行时。

use std::io::{self, Stdout};

use crossterm::event::KeyCode;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::catalog::Agent;
use crate::core::{Command, SessionHandle};
use crate::ui::event::{parse_input, AppEvent, EventHandler, UserInput, HELP_TEXT};
use crate::ui::render::draw;

/// 运行 TUI：启用原始模式与全屏，循环 poll 事件 + 渲染，退出时恢复终端
pub async fn run_app(agent: &'static Agent, session: SessionHandle) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, agent, &session).await;

    restore_terminal(&mut terminal)?;
    session.send(Command::Quit);
    let controller = session.join().await?;
    tracing::info!(
        messages = controller.messages().len(),
        "TUI closed"
    );
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    agent: &'static Agent,
    session: &SessionHandle,
) -> anyhow::Result<()> {
    let event_handler = EventHandler::new(session.commands());
    let messages_rx = session.messages();
    let view_rx = session.view();

    let mut input_buffer = String::new();
    let mut notice: Option<String> = None;
    let mut conversation_scroll = 0usize;
    let mut last_len = 0usize;

    loop {
        let messages = messages_rx.borrow().clone();
        let view = view_rx.borrow().clone();

        if messages.len() != last_len {
            last_len = messages.len();
            conversation_scroll = usize::MAX;
        }

        if let Some(ev) = event_handler.poll()? {
            match ev {
                AppEvent::Command(Command::Quit) => break,
                AppEvent::Command(_) => notice = None,
                AppEvent::Key(key) => match key.code {
                    KeyCode::Enter => {
                        let input = std::mem::take(&mut input_buffer);
                        notice = None;
                        match parse_input(&input, &messages) {
                            UserInput::Command(cmd) => event_handler.send(cmd),
                            UserInput::Exit => break,
                            UserInput::Help => notice = Some(HELP_TEXT.to_string()),
                            UserInput::Invalid(hint) if hint.is_empty() => {}
                            UserInput::Invalid(hint) => notice = Some(hint),
                        }
                    }
                    KeyCode::Backspace => {
                        input_buffer.pop();
                    }
                    KeyCode::Char(c) => input_buffer.push(c),
                    KeyCode::Up => conversation_scroll = conversation_scroll.saturating_sub(1),
                    KeyCode::Down => conversation_scroll = conversation_scroll.saturating_add(1),
                    KeyCode::PageUp => conversation_scroll = conversation_scroll.saturating_sub(10),
                    KeyCode::PageDown => {
                        conversation_scroll = conversation_scroll.saturating_add(10)
                    }
                    KeyCode::Home => conversation_scroll = 0,
                    KeyCode::End => conversation_scroll = usize::MAX,
                    KeyCode::Esc => input_buffer.clear(),
                    _ => {}
                },
            }
        }

        let mut scroll_info = (0usize, 0usize);
        terminal.draw(|f| {
            draw(
                f,
                agent,
                &view,
                &messages,
                &input_buffer,
                notice.as_deref(),
                conversation_scroll,
                &mut scroll_info,
            );
        })?;
        let (total_lines, viewport_height) = scroll_info;
        conversation_scroll = conversation_scroll.min(total_lines.saturating_sub(viewport_height));

        tokio::task::yield_now().await;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
