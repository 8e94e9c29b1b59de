// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no tensor code, no argument
// parsing. Each use case wires the data, ml and infra layers
// together for one goal.

// Corpus → vocabulary → datasets → training schedule
pub mod train_use_case;

// Checkpoint → greedy transfer of a corpus into the other style
pub mod transfer_use_case;
