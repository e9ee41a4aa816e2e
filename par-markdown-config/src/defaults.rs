//! Default value functions used by serde `#[serde(default = "...")]` attributes.

use std::collections::BTreeMap;

pub fn bool_true() -> bool {
    true
}

pub fn table_max_height_px() -> u32 {
    700
}

pub fn table_border_color() -> String {
    "#7b75b0".to_string()
}

pub fn cell_border_color() -> String {
    "#ddd".to_string()
}

pub fn cell_padding() -> String {
    "12px 8px".to_string()
}

pub fn diagram_aliases() -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    aliases.insert("diagram".to_string(), "mermaid".to_string());
    aliases
}

pub fn diagram_box_height_px() -> u32 {
    400
}

pub fn kroki_server() -> String {
    "https://kroki.io".to_string()
}

pub fn theme_font_family() -> String {
    "sans-serif".to_string()
}

pub fn theme_font_size() -> f32 {
    14.0
}

pub fn theme_background() -> String {
    "#FFFFFF".to_string()
}

pub fn export_background() -> String {
    "white".to_string()
}

pub fn export_margin() -> f32 {
    20.0
}

pub fn export_scale() -> f32 {
    1.0
}

pub fn export_filename() -> String {
    "image".to_string()
}

pub fn export_max_dimension() -> u32 {
    8192
}
