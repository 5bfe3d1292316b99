pub mod packet_codec;
