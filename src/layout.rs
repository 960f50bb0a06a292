use crate::face::model::X_CENTERED;

/// Fits `text` onto a display `display_width` pixels wide.
///
/// Returns the left edge and the text that fits. Text wider than the whole
/// display is cut to the display first, then positioned.
pub fn place(text: &str, font_width: u32, display_width: u32, x_position: i32) -> (i32, String) {
    let font_width = font_width.max(1) as i32;
    let display_width = display_width as i32;

    let mut text = text.to_string();
    truncate_chars(&mut text, (display_width / font_width).max(0) as usize);
    let text_width = text.chars().count() as i32 * font_width;

    if x_position == X_CENTERED {
        return ((display_width - text_width) / 2, text);
    }

    if x_position < X_CENTERED {
        let magnitude = x_position.unsigned_abs();
        let slots = ((magnitude / 10) as i32).max(1);
        let slot_index = ((magnitude % 10) as i32).clamp(1, slots);
        let slot_width = display_width / slots;
        let x = (slot_width - text_width) / 2 + slot_width * (slot_index - 1);
        return (x, text);
    }

    if text_width > display_width - x_position {
        let room = (display_width - x_position).max(0) / font_width;
        truncate_chars(&mut text, room as usize);
    }
    (x_position, text)
}

fn truncate_chars(text: &mut String, max_chars: usize) {
    if let Some((byte_index, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_index);
    }
}
