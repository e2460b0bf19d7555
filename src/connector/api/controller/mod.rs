pub mod connection_controller;
pub mod maintenance_controller;
pub mod personalized_controller;
pub mod recommendation_controller;

pub use connection_controller::ConnectionController;
pub use maintenance_controller::MaintenanceController;
pub use personalized_controller::PersonalizedController;
pub use recommendation_controller::RecommendationController;
