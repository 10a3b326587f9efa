mod future_utils;
mod type_utils;

pub use future_utils::join_all_errors;
pub use type_utils::short_type_name;
