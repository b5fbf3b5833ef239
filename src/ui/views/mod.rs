mod dashboard;
mod login;

pub use dashboard::DashboardView;
pub use login::LoginView;
