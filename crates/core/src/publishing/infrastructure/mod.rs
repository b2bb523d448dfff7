pub mod local_file_publisher;
