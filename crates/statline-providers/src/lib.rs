pub mod basketball_reference;
