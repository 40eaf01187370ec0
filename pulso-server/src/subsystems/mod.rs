pub mod avatar;
pub mod biometrics;
pub mod chat;
pub mod dashboard;
pub mod food;
pub mod intake;
