pub mod felling;
