pub mod elite_model;
