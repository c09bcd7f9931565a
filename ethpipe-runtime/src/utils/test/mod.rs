pub mod packet_collectors;
