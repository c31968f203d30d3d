mod in_memory_gateway;
mod tcp_gateway;

pub use in_memory_gateway::InMemoryGateway;
pub use tcp_gateway::TcpGateway;
