//! 界面渲染
//!
//! 标题栏显示智能体、阶段与回合进度；主体为消息日志（按发送方着色、题目展开为选项 / 目标提示、
//! 报告渲染为键值表、按宽度换行），底部为输入框与快捷键提示。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};

use crate::catalog::Agent;
use crate::chat::{report_entries, Message, MessageKind, Sender, TaskPayload};
use crate::core::{SessionPhase, SessionView};

/// 报告键的显示名；未知键原样显示
fn report_key_label(key: &str) -> &str {
    match key {
        "username" => "用户",
        "userId" => "用户ID",
        "timestamp" => "时间",
        "taskType" => "任务类型",
        "score" => "得分",
        "totalRounds" => "总题数",
        "quickTasksCompleted" => "完成快判任务",
        "collectionTasksCompleted" => "完成采集任务",
        "quickScoreTotal" => "快判总贡献度",
        "collectionScoreTotal" => "采集总贡献度",
        "totalScore" => "总贡献度",
        other => other,
    }
}

/// 将内容按宽度换行，支持 UTF-8（按字符数，避免在 UTF-8 中间截断）
fn wrap_text(s: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    for para in s.split('\n') {
        let mut line = String::new();
        for ch in para.chars() {
            if line.chars().count() >= width {
                lines.push(std::mem::take(&mut line));
            }
            line.push(ch);
        }
        lines.push(line);
    }
    lines
}

/// 单条消息的正文行（未加前缀、未换行）
pub(crate) fn message_body(m: &Message) -> Vec<String> {
    let mut body = Vec::new();
    match (m.kind, &m.payload) {
        (MessageKind::Report, _) => match report_entries(&m.content) {
            Ok(entries) => {
                body.push("📊 报告".to_string());
                for (key, value) in entries {
                    body.push(format!("  {}: {}", report_key_label(&key), value));
                }
            }
            Err(_) => body.push(m.content.clone()),
        },
        (_, Some(TaskPayload::ImageChoice { image_url, options, .. })) => {
            body.push(m.content.clone());
            body.push(format!("  🖼 {image_url}"));
            let choices: Vec<String> = options
                .iter()
                .enumerate()
                .map(|(i, o)| format!("[{}] {}", i + 1, o))
                .collect();
            body.push(format!("  {}", choices.join("   ")));
        }
        (_, Some(TaskPayload::ImageRequest { .. })) => {
            body.push(m.content.clone());
            body.push("  输入 /upload <图片路径> 提交照片".to_string());
        }
        (_, Some(TaskPayload::UserImage { image })) => {
            body.push(format!("{} ({})", m.content, image));
        }
        _ => {
            let suffix = if m.is_loading() { " …" } else { "" };
            body.push(format!("{}{}", m.content, suffix));
        }
    }
    body
}

fn message_style(m: &Message) -> (&'static str, Color) {
    match (m.sender, m.kind) {
        (Sender::User, _) => ("你  ", Color::Cyan),
        (Sender::Agent, MessageKind::System) => ("Sys ", Color::Gray),
        (Sender::Agent, MessageKind::Report) => ("AI  ", Color::Magenta),
        (Sender::Agent, _) => ("AI  ", Color::Green),
    }
}

/// 标题栏：智能体名 + 阶段 + 回合进度
pub(crate) fn status_title(agent: &Agent, view: &SessionView) -> String {
    let phase = if view.model_loading {
        "模型加载中…".to_string()
    } else {
        match view.phase {
            SessionPhase::Idle => "空闲".to_string(),
            SessionPhase::RoundActive => view.task.task_type().display_name().to_string(),
            SessionPhase::Resolving => "AI审核中…".to_string(),
        }
    };
    if view.task.is_active() {
        format!(
            " {} │ {} │ 第 {}/{} 题 │ 贡献度 {} ",
            agent.name,
            phase,
            view.task.current_round(),
            view.task.total_rounds(),
            view.task.score()
        )
    } else {
        format!(" {} │ {} ", agent.name, phase)
    }
}

/// 绘制一帧：上方对话区（标题 + 日志 + 滚动条），下方输入区；将 (总行数, 可视高度) 写入 out 供外部 clamp 滚动
#[allow(clippy::too_many_arguments)]
pub fn draw(
    f: &mut Frame,
    agent: &Agent,
    view: &SessionView,
    messages: &[Message],
    input_buffer: &str,
    notice: Option<&str>,
    conversation_scroll: usize,
    out: &mut (usize, usize),
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(5)])
        .split(f.area());

    let conv_area = chunks[0];
    let content_width = conv_area.width.saturating_sub(2).saturating_sub(1) as usize; // 边框 + 滚动条

    let block = Block::default()
        .title(status_title(agent, view))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let mut text_lines: Vec<Line> = Vec::new();
    for (idx, m) in messages.iter().enumerate() {
        if idx > 0 {
            text_lines.push(Line::from(Span::raw("")));
        }
        let (prefix, color) = message_style(m);
        let body_style = if m.kind == MessageKind::System {
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC)
        } else {
            Style::default()
        };
        let mut first = true;
        for para in message_body(m) {
            for line in wrap_text(&para, content_width.saturating_sub(4).max(20)) {
                let pref = if first { prefix } else { "    " };
                first = false;
                text_lines.push(Line::from(vec![
                    Span::styled(pref, Style::default().fg(color).add_modifier(Modifier::BOLD)),
                    Span::styled(line, body_style),
                ]));
            }
        }
    }

    let content_height = conv_area.height.saturating_sub(2) as usize;
    let total_lines = text_lines.len();
    let max_scroll = total_lines.saturating_sub(content_height);
    let scroll_offset = conversation_scroll.min(max_scroll);

    let inner = block.inner(conv_area);
    f.render_widget(block, conv_area);
    let paragraph = Paragraph::new(Text::from(text_lines)).scroll((scroll_offset as u16, 0));
    f.render_widget(paragraph, inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::new(total_lines)
            .position(scroll_offset)
            .viewport_content_length(content_height);
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .thumb_symbol("█")
            .track_symbol(Some("░"));
        f.render_stateful_widget(scrollbar, inner, &mut scrollbar_state);
    }

    let (input_title, border_color) = match notice {
        Some(n) if !n.is_empty() => (format!(" {} ", n), Color::Red),
        _ if view.phase == SessionPhase::Resolving || view.model_loading => {
            (" 请稍候… ".to_string(), Color::DarkGray)
        }
        _ => (" 输入 ".to_string(), Color::Blue),
    };

    let hint = " Enter 发送 │ /help 帮助 │ Ctrl+S 统计 │ Ctrl+A 放弃 │ Ctrl+Q 退出 ";
    let input_block = Block::default()
        .title(input_title)
        .title_bottom(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let input = Paragraph::new(input_buffer)
        .block(input_block)
        .wrap(Wrap { trim: false });
    f.render_widget(input, chunks[1]);

    out.0 = total_lines;
    out.1 = content_height;
}
