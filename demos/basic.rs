use adaptable_topk::TopKSelector;

fn main() {
    // Keep the 3 elements with the largest scores.
    let mut top: TopKSelector<&str, i64> = TopKSelector::new(3);

    top.add_or_update("a", 10).unwrap();
    top.add_or_update("b", 20).unwrap();
    top.add_or_update("c", 15).unwrap();
    top.add_or_update("d", 5).unwrap();
    top.add_or_update("e", 25).unwrap();

    // Print the retained elements, best first
    println!("Top elements:");
    for (element, score) in top.top() {
        println!("{}: {}", element, score);
    }

    // Re-keying moves an element across the boundary
    top.add_or_update("d", 30).unwrap();
    println!("\nIs 'd' in top-k after raising it to 30? {}",
        if top.contains("d") { "yes" } else { "no" });

    // Deleting a retained element promotes the best excluded one
    top.delete(&"d");
    println!("Is 'a' back in top-k after deleting 'd'? {}",
        if top.contains("a") { "yes" } else { "no" });
}
