// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: sentences that carry a style label, and the two roles
// the rest of the program plays around them (a corpus source
// and a style transferer).
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

// A sentence tagged with its style class
pub mod sentence;

// Core abstractions (traits) that other layers implement
pub mod traits;
