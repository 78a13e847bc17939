//! Model components: conv encoder, projection head, the combined SimCLR
//! model, and the tensor bridge between decoded image buffers and burn
//! tensors.

pub mod bridge;
pub mod encoder;
pub mod net;
pub mod projection;
