use crate::config::{ColorSettings, Settings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub primary: &'static str,
    pub background: &'static str,
}

pub const THEMES: [Theme; 7] = [
    Theme {
        name: "default",
        primary: "rgb(100, 180, 255)",
        background: "#000000",
    },
    Theme {
        name: "catppuccin-mocha",
        primary: "#89b4fa",
        background: "#1e1e2e",
    },
    Theme {
        name: "catppuccin-latte",
        primary: "#1e66f5",
        background: "#eff1f5",
    },
    Theme {
        name: "dracula",
        primary: "#bd93f9",
        background: "#282a36",
    },
    Theme {
        name: "nord",
        primary: "#88c0d0",
        background: "#2e3440",
    },
    Theme {
        name: "gruvbox",
        primary: "#fabd2f",
        background: "#282828",
    },
    Theme {
        name: "tokyo-night",
        primary: "#7aa2f7",
        background: "#1a1b26",
    },
];

/// Unknown names resolve to the default theme.
pub fn theme_by_name(name: &str) -> Theme {
    let name = name.trim();
    THEMES
        .iter()
        .copied()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .unwrap_or(THEMES[0])
}

pub fn next_theme(current: &str) -> Theme {
    let i = THEMES
        .iter()
        .position(|t| t.name.eq_ignore_ascii_case(current.trim()))
        .unwrap_or(0);
    THEMES[(i + 1) % THEMES.len()]
}

/// Apply the preset named in `settings.theme`, unless the file carries its own colors.
pub fn resolve_theme(settings: &mut Settings) {
    let Some(name) = settings.theme.clone() else {
        return;
    };
    if settings.colors == ColorSettings::default() {
        theme_by_name(&name).apply(settings);
    }
}

impl Theme {
    /// Replaces the palette colors; explicit glow/shadow overrides are dropped so they
    /// are derived from the new primary.
    pub fn apply(&self, settings: &mut Settings) {
        settings.theme = Some(self.name.to_string());
        settings.colors = ColorSettings {
            primary: self.primary.to_string(),
            background: self.background.to_string(),
            glow: None,
            shadow: None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;

    #[test]
    fn all_theme_colors_parse() {
        for t in THEMES {
            assert!(Rgba::parse(t.primary).is_some(), "{}", t.name);
            assert!(Rgba::parse(t.background).is_some(), "{}", t.name);
        }
    }

    #[test]
    fn lookup_and_cycle() {
        assert_eq!(theme_by_name("Nord").name, "nord");
        assert_eq!(theme_by_name("nope").name, "default");
        assert_eq!(next_theme("default").name, "catppuccin-mocha");
        assert_eq!(next_theme("tokyo-night").name, "default");
    }

    #[test]
    fn apply_resets_derived_colors() {
        let mut s = Settings::default();
        s.colors.glow = Some("#ffffff".into());
        theme_by_name("dracula").apply(&mut s);
        assert_eq!(s.theme.as_deref(), Some("dracula"));
        assert_eq!(s.colors.primary, "#bd93f9");
        assert!(s.colors.glow.is_none());
    }

    #[test]
    fn custom_colors_beat_named_theme() {
        let mut s = Settings::default();
        s.theme = Some("nord".into());
        resolve_theme(&mut s);
        assert_eq!(s.colors.primary, "#88c0d0");

        let mut custom = Settings::default();
        custom.theme = Some("nord".into());
        custom.colors.primary = "#ff0000".into();
        resolve_theme(&mut custom);
        assert_eq!(custom.colors.primary, "#ff0000");
    }
}
