use serenity::{
    all::ButtonStyle,
    builder::{
        CreateActionRow, CreateButton, CreateSelectMenu, CreateSelectMenuKind,
        CreateSelectMenuOption,
    },
};

/// Custom ids for the player components
pub mod button_ids {
    pub const PAUSE_TOGGLE: &str = "music_pause_toggle";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    pub const VOLUME: &str = "music_volume";
    pub const VOLUME_SELECT: &str = "music_volume_select";
}

/// Volume steps offered by the select menu.
pub const VOLUME_STEPS: [u8; 4] = [25, 50, 75, 100];

/// Player control row shown with "now playing".
pub fn create_player_buttons(paused: bool) -> Vec<CreateActionRow> {
    let (emoji, label) = if paused {
        ('▶', "Resume")
    } else {
        ('⏸', "Pause")
    };

    let toggle = CreateButton::new(button_ids::PAUSE_TOGGLE)
        .emoji(emoji)
        .label(label)
        .style(ButtonStyle::Primary);

    let skip = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .label("Skip")
        .style(ButtonStyle::Secondary);

    let stop = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .label("Stop")
        .style(ButtonStyle::Danger);

    let volume = CreateButton::new(button_ids::VOLUME)
        .emoji('🔊')
        .label("Volume")
        .style(ButtonStyle::Secondary);

    vec![CreateActionRow::Buttons(vec![toggle, skip, stop, volume])]
}

/// Which step the menu preselects: the closest one to `current`, ties going up.
pub fn preselected_step(current: u8) -> u8 {
    VOLUME_STEPS
        .iter()
        .copied()
        .min_by_key(|step| (step.abs_diff(current), u8::MAX - step))
        .unwrap_or(50)
}

pub fn create_volume_menu(current: u8) -> Vec<CreateActionRow> {
    let selected = preselected_step(current);
    let options = VOLUME_STEPS
        .iter()
        .map(|&step| {
            CreateSelectMenuOption::new(format!("{}%", step), step.to_string())
                .default_selection(step == selected)
        })
        .collect();

    let menu = CreateSelectMenu::new(
        button_ids::VOLUME_SELECT,
        CreateSelectMenuKind::String { options },
    )
    .placeholder(format!("🔊 Volume: {}%", current));

    vec![CreateActionRow::SelectMenu(menu)]
}

/// Parses the value of a volume menu choice.
pub fn parse_volume_choice(value: &str) -> Option<i64> {
    value
        .parse::<u8>()
        .ok()
        .filter(|step| VOLUME_STEPS.contains(step))
        .map(i64::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preselected_step() {
        assert_eq!(preselected_step(50), 50);
        assert_eq!(preselected_step(0), 25);
        assert_eq!(preselected_step(60), 50);
        assert_eq!(preselected_step(63), 75);
        assert_eq!(preselected_step(100), 100);
    }

    #[test]
    fn test_parse_volume_choice() {
        assert_eq!(parse_volume_choice("75"), Some(75));
        assert_eq!(parse_volume_choice("60"), None);
        assert_eq!(parse_volume_choice("loud"), None);
    }
}
