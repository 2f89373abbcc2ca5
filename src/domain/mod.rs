pub mod delivery;
pub mod expression;
pub mod forward;
pub mod lifecycle;
pub mod notification;
pub mod template;
