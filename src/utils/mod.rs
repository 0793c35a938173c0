pub mod db_utils;
