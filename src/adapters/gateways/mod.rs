//! Payment gateway adapters.

mod flow;
mod mercadopago;
mod mock;

pub use flow::{sign_params, FlowConfig, FlowGateway};
pub use mercadopago::{MercadoPagoConfig, MercadoPagoGateway};
pub use mock::MockGateway;
