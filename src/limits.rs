pub const MAX_NAME_LEN: usize = 120;
pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 2_000;
pub const MAX_REASON_LEN: usize = 500;
/// Largest Monday-based weekday index.
pub const MAX_WEEKDAY: u8 = 6;
