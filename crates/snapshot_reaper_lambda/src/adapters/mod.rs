pub mod ec2;
