fn main() {
    holodeck_pipeline::cli::run();
}
