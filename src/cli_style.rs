use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as CtColor, Stylize};
use unicode_width::UnicodeWidthStr;

use cloudmagnet::notifications::{Notice, NoticeVariant};

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const SKY: Color = Color::Rgb {
        r: 56,
        g: 189,
        b: 248,
    };
    pub const INDIGO: Color = Color::Rgb {
        r: 129,
        g: 140,
        b: 248,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 255,
        b: 136,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

pub mod box_chars {
    pub const SINGLE_HORIZONTAL: &str = "─";
    pub const SINGLE_VERTICAL: &str = "│";

    pub const ROUND_TOP_LEFT: &str = "╭";
    pub const ROUND_TOP_RIGHT: &str = "╮";
    pub const ROUND_BOTTOM_LEFT: &str = "╰";
    pub const ROUND_BOTTOM_RIGHT: &str = "╯";

    pub const T_LEFT: &str = "├";
    pub const T_RIGHT: &str = "┤";
    pub const T_TOP: &str = "┬";
    pub const T_BOTTOM: &str = "┴";
    pub const CROSS: &str = "┼";

    pub const BULLET: &str = "●";
    pub const BULLET_EMPTY: &str = "○";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";

    pub const BAR_FULL: &str = "█";
    pub const BAR_EMPTY: &str = "░";
}

// ═══════════════════════════════════════════════════════════════════════════════
// Banner
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_banner() {
    let banner = r#"
     ██████╗██╗      ██████╗ ██╗   ██╗██████╗ ███╗   ███╗ █████╗  ██████╗ ███╗   ██╗███████╗████████╗
    ██╔════╝██║     ██╔═══██╗██║   ██║██╔══██╗████╗ ████║██╔══██╗██╔════╝ ████╗  ██║██╔════╝╚══██╔══╝
    ██║     ██║     ██║   ██║██║   ██║██║  ██║██╔████╔██║███████║██║  ███╗██╔██╗ ██║█████╗     ██║
    ██║     ██║     ██║   ██║██║   ██║██║  ██║██║╚██╔╝██║██╔══██║██║   ██║██║╚██╗██║██╔══╝     ██║
    ╚██████╗███████╗╚██████╔╝╚██████╔╝██████╔╝██║ ╚═╝ ██║██║  ██║╚██████╔╝██║ ╚████║███████╗   ██║
     ╚═════╝╚══════╝ ╚═════╝  ╚═════╝ ╚═════╝ ╚═╝     ╚═╝╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═══╝╚══════╝   ╚═╝
"#;

    let gradient_colors = [
        colors::SKY,
        colors::SKY,
        colors::SKY,
        colors::INDIGO,
        colors::INDIGO,
        colors::INDIGO,
        colors::INDIGO,
    ];

    for (i, line) in banner.lines().enumerate() {
        let color = gradient_colors.get(i).unwrap_or(&colors::SKY);
        println!("{}", line.with(*color).bold());
    }

    let subtitle = format!(
        "  ═══════════  MAGNET LINKS TO YOUR CLOUD  ·  v{}  ═══════════",
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", subtitle.with(colors::DIM));
    println!();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        box_chars::CHECK.to_string().with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    println!(
        " {} {}",
        box_chars::CROSS_MARK.to_string().with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

pub fn print_warning(message: &str) {
    println!(
        " {} {}",
        "⚠".with(colors::ORANGE).bold(),
        message.with(colors::ORANGE)
    );
}

/// A toast, rendered as a two-part line.
pub fn print_notice(notice: &Notice) {
    let (mark, color) = match notice.variant {
        NoticeVariant::Info => (box_chars::CHECK, colors::SKY),
        NoticeVariant::Destructive => (box_chars::CROSS_MARK, colors::RED),
    };
    println!(
        " {} {} {}",
        mark.with(color).bold(),
        notice.title.as_str().with(color).bold(),
        notice.description.as_str().with(colors::WHITE)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Section Headers
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_section_header(title: &str) {
    let width: usize = 60;
    let title_len = title.width();
    let padding = width.saturating_sub(title_len + 4) / 2;

    println!();
    print!("{}", box_chars::ROUND_TOP_LEFT.with(colors::SKY));
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL.repeat(padding).with(colors::SKY)
    );
    print!(
        " {} ",
        title.with(colors::SKY).bold().attribute(Attribute::Italic)
    );
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL
            .repeat(width.saturating_sub(title_len + 4 + padding))
            .with(colors::SKY)
    );
    println!("{}", box_chars::ROUND_TOP_RIGHT.with(colors::SKY));
}

pub fn print_section_footer() {
    let width = 60;
    print!("{}", box_chars::ROUND_BOTTOM_LEFT.with(colors::SKY));
    print!(
        "{}",
        box_chars::SINGLE_HORIZONTAL.repeat(width).with(colors::SKY)
    );
    println!("{}", box_chars::ROUND_BOTTOM_RIGHT.with(colors::SKY));
    println!();
}

// ═══════════════════════════════════════════════════════════════════════════════
// Key-Value Display
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_key_value(key: &str, value: &str) {
    println!(
        "  {} {} {}",
        box_chars::BULLET.with(colors::INDIGO),
        format!("{}:", key).with(colors::DIM),
        value.with(colors::WHITE)
    );
}

pub fn print_empty_list(message: &str) {
    println!(
        "  {} {}",
        box_chars::BULLET_EMPTY.with(colors::DIM),
        message.with(colors::DIM).attribute(Attribute::Italic)
    );
}

/// `████░░░░░░ 40%`
pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = (percent.min(100) as usize * width) / 100;
    format!(
        "{}{} {:>3}%",
        box_chars::BAR_FULL.repeat(filled),
        box_chars::BAR_EMPTY.repeat(width - filled),
        percent
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Display
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    col_widths: Vec<usize>,
}

impl TableBuilder {
    pub fn new(headers: Vec<&str>) -> Self {
        let col_widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
        TableBuilder {
            headers: headers.into_iter().map(String::from).collect(),
            rows: Vec::new(),
            col_widths,
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        for (i, cell) in row.iter().enumerate() {
            if i < self.col_widths.len() {
                self.col_widths[i] = self.col_widths[i].max(cell.width());
            }
        }
        self.rows.push(row);
    }

    pub fn print(&self) {
        self.print_border(
            box_chars::ROUND_TOP_LEFT,
            box_chars::T_TOP,
            box_chars::ROUND_TOP_RIGHT,
        );

        print!("{}", box_chars::SINGLE_VERTICAL.with(colors::SKY));
        for (i, header) in self.headers.iter().enumerate() {
            let padding = self.col_widths[i] - header.width();
            print!(
                " {}{} ",
                header.clone().with(colors::SKY).bold(),
                " ".repeat(padding)
            );
            print!("{}", box_chars::SINGLE_VERTICAL.with(colors::SKY));
        }
        println!();

        self.print_border(box_chars::T_LEFT, box_chars::CROSS, box_chars::T_RIGHT);

        for row in &self.rows {
            print!("{}", box_chars::SINGLE_VERTICAL.with(colors::SKY));
            for (i, cell) in row.iter().enumerate() {
                let width = self.col_widths.get(i).unwrap_or(&0);
                let padding = width.saturating_sub(cell.width());
                print!(" {}{} ", cell.clone().with(cell_color(cell)), " ".repeat(padding));
                print!("{}", box_chars::SINGLE_VERTICAL.with(colors::SKY));
            }
            println!();
        }

        self.print_border(
            box_chars::ROUND_BOTTOM_LEFT,
            box_chars::T_BOTTOM,
            box_chars::ROUND_BOTTOM_RIGHT,
        );
    }

    fn print_border(&self, left: &str, junction: &str, right: &str) {
        print!("{}", left.with(colors::SKY));
        for (i, width) in self.col_widths.iter().enumerate() {
            print!(
                "{}",
                box_chars::SINGLE_HORIZONTAL
                    .repeat(width + 2)
                    .with(colors::SKY)
            );
            if i < self.col_widths.len() - 1 {
                print!("{}", junction.with(colors::SKY));
            }
        }
        println!("{}", right.with(colors::SKY));
    }
}

// Status words get their own colour.
fn cell_color(cell: &str) -> CtColor {
    match cell {
        "completed" => colors::GREEN,
        "failed" => colors::RED,
        "paused" => colors::ORANGE,
        "queued" => colors::DIM,
        _ => colors::WHITE,
    }
}
