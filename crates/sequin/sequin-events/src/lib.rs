pub mod triple;
pub use triple::Triple;

// Payload types published through a seqlock must be plain `Copy` data:
// fixed-size, no pointers, no destructors. Every field is a scalar so a
// snapshot is meaningful on its own.
