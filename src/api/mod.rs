// HTTP gateway to the TAP backend

pub mod gateway;

pub use gateway::ApiGateway;
