use ratatui::style::{Color, Modifier, Style};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    #[allow(dead_code)]
    Light,
    Dark,
}

#[derive(Clone, Debug)]
pub struct Theme {
    #[allow(dead_code)]
    pub mode: ThemeMode,
    pub bg: Color,
    #[allow(dead_code)]
    pub fg: Color,
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    #[allow(dead_code)]
    pub frame: Color,
    pub selected: Color,
    pub success: Color,
    pub error: Color,
    pub muted: Color,
}

impl Theme {
    pub fn panel_dark() -> Self {
        Self {
            mode: ThemeMode::Dark,
            bg: Color::Rgb(22, 24, 28),
            fg: Color::White,
            primary: Color::Rgb(255, 170, 0),
            secondary: Color::Rgb(90, 200, 250),
            accent: Color::Rgb(80, 170, 240),
            frame: Color::Rgb(88, 94, 104),
            selected: Color::Rgb(255, 150, 40),
            success: Color::Green,
            error: Color::Red,
            muted: Color::DarkGray,
        }
    }

    #[allow(dead_code)]
    pub fn panel_light() -> Self {
        Self {
            mode: ThemeMode::Light,
            bg: Color::Rgb(244, 245, 247),
            fg: Color::Rgb(22, 24, 28),
            primary: Color::Rgb(190, 120, 0),
            secondary: Color::Rgb(0, 130, 180),
            accent: Color::Rgb(30, 110, 200),
            frame: Color::Rgb(196, 200, 208),
            selected: Color::Rgb(210, 110, 20),
            success: Color::Rgb(0, 150, 0),
            error: Color::Rgb(200, 0, 0),
            muted: Color::Rgb(120, 124, 132),
        }
    }

    #[allow(dead_code)]
    pub fn from_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self::panel_dark(),
            ThemeMode::Light => Self::panel_light(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::panel_dark()
    }
}

// Style helpers that use the theme
impl Theme {
    pub fn border_focused(&self) -> Style {
        Style::default().fg(self.selected)
    }

    #[allow(dead_code)]
    pub fn border_unfocused(&self) -> Style {
        Style::default().fg(self.frame)
    }

    pub fn text_active_bold(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_editing_bold(&self) -> Style {
        Style::default()
            .fg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn text_error(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn text_success(&self) -> Style {
        Style::default().fg(self.success)
    }

    pub fn list_cursor_style(&self) -> Style {
        Style::default()
            .fg(self.bg)
            .bg(self.selected)
            .add_modifier(Modifier::BOLD)
    }

    #[allow(dead_code)]
    pub fn title_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn toast_color(&self, level: crate::ui::ToastLevel) -> Color {
        match level {
            crate::ui::ToastLevel::Success => self.success,
            crate::ui::ToastLevel::Error => self.error,
            crate::ui::ToastLevel::Info => self.accent,
        }
    }
}

// Palette constants for call sites that do not carry a theme reference
pub const ACCENT: Color = Color::Rgb(80, 170, 240);
pub const PRIMARY: Color = Color::Rgb(255, 170, 0);
pub const SECONDARY: Color = Color::Rgb(90, 200, 250);
#[allow(dead_code)]
pub const ACTIVE: Color = Color::Cyan;
#[allow(dead_code)]
pub const SUCCESS: Color = Color::Green;
#[allow(dead_code)]
pub const ERROR: Color = Color::Red;
pub const MUTED: Color = Color::DarkGray;

pub fn border_focused() -> Style {
    Theme::default().border_focused()
}

pub fn text_active_bold() -> Style {
    Theme::default().text_active_bold()
}

pub fn text_editing_bold() -> Style {
    Theme::default().text_editing_bold()
}

pub fn text_muted() -> Style {
    Theme::default().text_muted()
}

pub fn text_error() -> Style {
    Theme::default().text_error()
}

pub fn text_success() -> Style {
    Theme::default().text_success()
}

pub fn toast_color(level: crate::ui::ToastLevel) -> Color {
    Theme::default().toast_color(level)
}

pub fn list_cursor_style() -> Style {
    Theme::default().list_cursor_style()
}
