/// LSTM cell with batched forward and backward passes.
pub mod lstm_cell;

/// Inverted dropout between recurrent layers.
pub mod dropout;

/// Dense output head.
pub mod linear;
