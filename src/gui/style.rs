use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

/// A device in the scan result list; the connected one is highlighted.
pub struct DeviceEntryStyleSheet {
    pub connected: bool,
}

impl StyleSheet for DeviceEntryStyleSheet {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> Appearance {
        let background = if self.connected {
            Color::from_rgb8(0xc8, 0xfa, 0xcc)
        } else {
            Color::from_rgb8(0xee, 0xee, 0xee)
        };

        Appearance {
            shadow_offset: Default::default(),
            background: Some(Background::Color(background)),
            text_color: Color::BLACK,
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 5.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}
