/// FAST corner at an integer pixel with its score.
///
/// The score is the largest threshold for which the pixel still passes the
/// segment test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corner {
    pub x: u32,
    pub y: u32,
    pub score: u8,
}

/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    /// Factor from level coordinates back to level 0 coordinates.
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}
