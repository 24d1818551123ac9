fn main() {
    squall_client::app::run();
}
